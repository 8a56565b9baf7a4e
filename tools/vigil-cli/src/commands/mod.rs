pub mod check;
pub mod info;
pub mod init;
pub mod invite;
pub mod take;
