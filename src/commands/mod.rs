pub mod app_info;
pub mod catalog;
pub mod health;
pub mod playback;
