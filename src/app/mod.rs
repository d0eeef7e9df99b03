//! Application use cases and transactions.

mod dose_log;
mod medication;
mod user;
mod user_medication;

pub use dose_log::{
    adherence_summary, dose_log_list, dose_log_record, AdherenceDto, DoseLogCreateReq, DoseLogDto,
    DoseLogFilter, DoseLogListReq, DoseLogPage, DoseLogRecordResult,
};
pub use medication::{
    medication_create, medication_delete, medication_get, medication_list, medication_update,
    MedicationCreateReq, MedicationDto, MedicationUpdateReq,
};
pub use user::{user_create, user_delete, user_get, user_list, user_update, UserCreateReq, UserDto, UserUpdateReq};
pub use user_medication::{
    user_medication_create, user_medication_delete, user_medication_get,
    user_medication_list_by_user, user_medication_update, UserMedicationCreateReq,
    UserMedicationDto, UserMedicationUpdateReq,
};
