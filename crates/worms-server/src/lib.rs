pub mod server;
pub mod sv_game;
pub mod sv_main;
pub mod sv_send;
pub mod sv_user;
