
mod access;
mod flows;
mod server;
