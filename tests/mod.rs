mod common;

mod api_tests;
mod validator_tests;
mod verifier_tests;
