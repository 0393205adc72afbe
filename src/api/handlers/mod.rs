// API handlers - thin HTTP layer
// Handlers only deal with HTTP concerns:
// 1. Extract the request body
// 2. Call the registrar
// 3. Transform the outcome or error to an HTTP response

pub mod health;
pub mod registration;

pub use health::health_check;
pub use registration::register_beneficiary_handler;
