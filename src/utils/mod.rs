pub mod auxiliary;
pub mod isr_queues;
pub mod notification;
pub mod pipeline_error;
