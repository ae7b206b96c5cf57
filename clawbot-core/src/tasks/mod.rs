pub mod admission_worker;
pub mod queue_maintenance;
pub mod scheduler;

pub use admission_worker::spawn_admission_worker;
pub use queue_maintenance::spawn_queue_maintenance_task;
pub use scheduler::spawn_scheduler_task;
