mod test_file_pair_context;
mod test_server_factory;
