use std::sync::Arc;

use study_core::{update, AppState, CourseEntry, CourseFlag, Effect, Msg, Notification};
use study_logging::study_debug;

use crate::ApiClient;

/// Runs the library messages through the core update loop and performs the
/// resulting backend calls.
pub struct LibraryController {
    api: Arc<ApiClient>,
    state: AppState,
}

impl LibraryController {
    pub fn new(api: Arc<ApiClient>) -> Self {
        Self {
            api,
            state: AppState::new(),
        }
    }

    pub fn courses(&self) -> &[CourseEntry] {
        self.state.courses()
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub async fn load(&mut self) -> Vec<Notification> {
        let msg = match self.api.library().await {
            Ok(courses) => Msg::LibraryLoaded(courses),
            Err(err) => Msg::LibraryLoadFailed(err.failure()),
        };
        self.run(msg).await
    }

    pub async fn toggle(&mut self, id: &str, flag: CourseFlag) -> Vec<Notification> {
        self.run(Msg::ToggleRequested {
            id: id.to_string(),
            flag,
        })
        .await
    }

    pub async fn delete(&mut self, id: &str) -> Vec<Notification> {
        self.run(Msg::DeleteRequested { id: id.to_string() }).await
    }

    async fn run(&mut self, msg: Msg) -> Vec<Notification> {
        let mut pending = vec![msg];
        let mut notices = Vec::new();
        while let Some(msg) = pending.pop() {
            let (state, effects) = update(std::mem::take(&mut self.state), msg);
            self.state = state;
            for effect in effects {
                match effect {
                    Effect::PatchCourseStatus { id, flag, value } => {
                        let reply = self.api.update_course_status(&id, flag, value).await;
                        pending.push(match reply {
                            Ok(()) => Msg::ToggleSucceeded { id, flag },
                            Err(err) => Msg::ToggleFailed {
                                id,
                                flag,
                                failure: err.failure(),
                            },
                        });
                    }
                    Effect::DeleteCourse { id } => {
                        pending.push(match self.api.delete_document(&id).await {
                            Ok(()) => Msg::CourseDeleted { id },
                            Err(err) => Msg::DeleteFailed {
                                id,
                                failure: err.failure(),
                            },
                        });
                    }
                    Effect::Notify(notice) => notices.push(notice),
                    other => study_debug!("Library controller ignoring {:?}", other),
                }
            }
        }
        notices
    }
}
