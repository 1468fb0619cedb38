pub mod ignore_entry;
pub mod movie;
pub mod watch_entry;
