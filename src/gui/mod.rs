pub mod pid_console_gui;
