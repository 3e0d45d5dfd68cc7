use crate::utils::build_info;

pub fn version() {
    for line in build_info::current().lines() {
        println!("{line}");
    }
}
