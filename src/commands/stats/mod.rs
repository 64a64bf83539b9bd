mod output;
mod queries;
mod run;

pub use run::run;
