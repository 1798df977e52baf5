mod utils;

mod parse_good;
