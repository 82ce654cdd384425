mod common;
mod flow;
mod service;
