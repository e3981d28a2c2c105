pub mod zll;
pub mod zdp;
