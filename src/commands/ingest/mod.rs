mod manifest;
mod run;

pub use run::run;
