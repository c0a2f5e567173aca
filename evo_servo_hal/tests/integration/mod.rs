mod common;
mod faults;
mod item_requests;
mod lifecycle;
mod reboot;
mod torque;
