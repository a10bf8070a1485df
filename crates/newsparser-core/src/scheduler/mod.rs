mod service;

pub use service::{format_trigger, job_action, JobAction, JobInfo, SchedulerService};
