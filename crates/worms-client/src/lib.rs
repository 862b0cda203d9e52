pub mod cl_input;
pub mod cl_main;
pub mod cl_parse;
pub mod client;
