mod mock_transport;

mod controller;
mod response_parser;
