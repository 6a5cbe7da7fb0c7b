pub mod analytics;
pub mod handlers;
pub mod reasons;
pub mod steps;
pub mod survey;
pub mod transitions;
pub mod variant;
