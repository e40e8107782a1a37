//! Table-driven checks of the category wiring and typed record views.
//!
//! Each `#[case]` is isolated — no shared state.

use rstest::rstest;
use serde_json::json;
use swarmlink_core::{Category, Message, Record, RecordId, Swarm, SwarmId};

#[rstest]
#[case(Category::Message, "messages", "Messages", "messageId")]
#[case(Category::News, "news", "News", "newsId")]
#[case(Category::Thought, "thoughts", "Thoughts", "thoughtId")]
#[case(Category::Mission, "missions", "Missions", "missionId")]
#[case(Category::Specification, "specifications", "Specifications", "specificationId")]
#[case(Category::Deliverable, "deliverables", "Deliverables", "deliverableId")]
#[case(Category::Collaboration, "collaborations", "Collaborations", "collaborationId")]
#[case(Category::Swarm, "swarms", "Swarms", "swarmId")]
fn category_wiring(
    #[case] category: Category,
    #[case] dir: &str,
    #[case] table: &str,
    #[case] id_field: &str,
) {
    assert_eq!(category.dir_name(), dir);
    assert_eq!(category.table_name(), table);
    assert_eq!(category.id_field(), id_field);
    assert_eq!(Category::from_dir_name(dir), Some(category));
}

#[rstest]
#[case(Category::Message, true)]
#[case(Category::News, true)]
#[case(Category::Thought, true)]
#[case(Category::Mission, true)]
#[case(Category::Specification, true)]
#[case(Category::Deliverable, true)]
#[case(Category::Collaboration, false)]
#[case(Category::Swarm, false)]
fn announcement_policy(#[case] category: Category, #[case] notifies: bool) {
    assert_eq!(category.notifies(), notifies);
}

#[rstest]
fn record_round_trips_through_typed_view() {
    let record = Record::from_value(
        Category::Message,
        json!({
            "messageId": "m1",
            "senderId": "A",
            "receiverId": "B",
            "content": "status update",
        }),
    )
    .expect("valid record");

    let message: Message = record.view().expect("typed view");
    assert_eq!(message.message_id, RecordId::from("m1"));
    assert_eq!(message.receiver_id, Some(SwarmId::from("B")));
}

#[rstest]
fn swarm_view_tolerates_missing_optional_fields() {
    let record = Record::from_value(Category::Swarm, json!({"swarmId": "kin"}))
        .expect("valid record");

    let swarm: Swarm = record.view().expect("typed view");
    assert!(swarm.telegram_chat_id.is_none());
}
