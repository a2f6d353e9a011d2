mod config;
mod credentials;
mod materialize;
mod supervisor;
