pub mod check;
pub mod randomize;
pub mod serve;
