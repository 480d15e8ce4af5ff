pub mod dirty_flag_set;
