pub mod boq_job;
pub mod client;
pub mod job;
pub mod job_material;
pub mod material;
pub mod project;
pub mod supplier_price;
