mod batch;
mod group;
mod run;
mod worker;

pub use batch::BatchCommands;
pub use group::GroupCommands;
pub use run::RunCommands;
pub use worker::WorkerCommands;
