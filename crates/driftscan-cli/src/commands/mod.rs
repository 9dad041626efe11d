pub mod export;
pub mod info;
pub mod run;
pub mod track;
