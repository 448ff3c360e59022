mod requests;
mod responses;

pub use requests::{
    CreatePostRequest, CreateUserRequest, JsonBody, SendMailRequest, SendQueueMessageRequest,
    UpdatePostRequest, UpdateUserRequest,
};
pub use responses::{ApiResponse, DeliveryResponse};
