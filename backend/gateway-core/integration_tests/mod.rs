mod gateway_tests {
    pub mod helpers;

    mod auth;
    mod proxy;
    mod routes;
    mod websocket;
}

mod client_tests {
    mod gateway_client;
}

mod materialize_tests {
    mod concurrency;
}
