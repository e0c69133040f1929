pub mod command_service;
pub mod console_service;
pub mod telegram_service;
