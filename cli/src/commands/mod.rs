mod catalog;
mod export;
mod helpers;
mod history;
mod log;
mod settings;

pub(crate) use catalog::{
    cmd_category_add, cmd_category_delete, cmd_category_list, cmd_category_rename,
    cmd_serving_add, cmd_serving_delete, cmd_serving_list, cmd_serving_move,
    cmd_serving_set_calories,
};
pub(crate) use export::cmd_export;
pub(crate) use history::{cmd_clear, cmd_day, cmd_history, cmd_transfer};
pub(crate) use log::{cmd_log, cmd_remove, cmd_remove_day, cmd_today};
pub(crate) use settings::{
    cmd_settings_set_start_of_day, cmd_settings_set_target, cmd_settings_show,
};
