pub mod controls;
pub mod datatable;
