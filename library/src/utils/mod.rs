pub(crate) mod uid_generator;
