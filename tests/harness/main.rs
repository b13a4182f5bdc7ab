// Harness integration tests
