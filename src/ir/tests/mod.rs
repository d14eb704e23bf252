#![cfg(test)]

mod lowering_tests;
