pub mod range;
pub mod responder;
pub mod transfer;
