pub mod user;

pub use user::{
    AnswerResponse, AuthenticateRequest, ConfirmQuery, PendingRegistration, RefreshRequest,
    SearchQuery, UpdateUserRequest, User, UserInternalResponse, UserResponse,
};
