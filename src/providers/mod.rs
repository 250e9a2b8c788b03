pub mod email;
pub mod jobsearch;
