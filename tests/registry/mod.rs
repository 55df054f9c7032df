mod activation_tests;
mod scoped_tests;
