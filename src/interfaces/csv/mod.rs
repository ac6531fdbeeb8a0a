pub mod listing_reader;
