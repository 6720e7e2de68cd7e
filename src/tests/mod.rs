// Test modules for pubip
// Shared fakes live in `support`; each other module covers one area

mod support;

mod dispatch_tests;
mod format_tests;
