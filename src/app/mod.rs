pub mod documents_use_case;
pub mod ports;
pub mod projects_use_case;
pub mod verification_use_case;
