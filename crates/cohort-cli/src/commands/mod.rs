pub mod batch;
pub mod dispatch;
pub mod group;
pub mod init;
pub mod run;
pub mod seed;
pub mod shared;
pub mod worker;
