pub mod answer;
pub mod context;
pub mod intent;
pub mod question;
