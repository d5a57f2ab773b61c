mod common;

mod state;
