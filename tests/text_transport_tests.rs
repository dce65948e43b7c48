// Integration tests for text queries
//
// Covers the single-retry behavior, dialog continuation between turns and
// the error cases of a query.

mod common;

use assistant_session::backend::{
    DialogStateOut, InboundFrame, ProtocolRevision, TurnInput,
};
use assistant_session::error::AssistantError;
use common::{answer, manager, ScriptedBackend, StreamScript};

#[tokio::test]
async fn test_query_returns_display_text() {
    let backend = ScriptedBackend::v1alpha2(vec![StreamScript::Respond(vec![
        InboundFrame::audio(vec![0u8; 8]),
        answer("It's 3 PM", &[0x01]),
    ])]);
    let manager = manager(&backend);

    let conversation = manager.open_conversation(None).await.unwrap();
    let mut transport = conversation.text_transport().unwrap();

    let response = transport.query("what time is it").await.unwrap();
    assert_eq!(response, "It's 3 PM");
    assert_eq!(transport.last_query(), Some("what time is it"));
    assert_eq!(transport.last_response(), Some("It's 3 PM"));

    let config = backend.stream(0).config().expect("config frame sent");
    assert_eq!(config.input, TurnInput::Text("what time is it".to_string()));
    assert_eq!(config.device.device_id, "254636TEST0001");
    assert_eq!(config.audio_out.volume_pct, 100);
    assert!(config.dialog_state.is_new_conversation);
    assert!(config.dialog_state.continuation_token.is_empty());
}

#[tokio::test]
async fn test_continuation_token_carried_to_next_turn() {
    let backend = ScriptedBackend::v1alpha2(vec![
        StreamScript::Respond(vec![answer("Okay, turning on the lights", &[0xAB, 0x01])]),
        StreamScript::Respond(vec![answer("Done", &[0xCD])]),
    ]);
    let manager = manager(&backend);

    let conversation = manager.open_conversation(None).await.unwrap();
    let mut transport = conversation.text_transport().unwrap();

    transport.query("turn on the lights").await.unwrap();

    let state = manager.dialog_state();
    assert_eq!(state.continuation_token.as_ref(), &[0xAB, 0x01]);
    assert!(!state.is_new_conversation);

    transport.query("make them brighter").await.unwrap();

    let first = backend.stream(0).config().unwrap();
    let second = backend.stream(1).config().unwrap();
    assert!(first.dialog_state.is_new_conversation);
    assert!(!second.dialog_state.is_new_conversation);
    assert_eq!(second.dialog_state.continuation_token.as_ref(), &[0xAB, 0x01]);
    assert_eq!(manager.dialog_state().continuation_token.as_ref(), &[0xCD]);
}

#[tokio::test]
async fn test_stream_end_is_retried_once() {
    let backend = ScriptedBackend::v1alpha2(vec![
        StreamScript::EndImmediately,
        StreamScript::Respond(vec![answer("Hello there", &[0x02])]),
    ]);
    let manager = manager(&backend);

    let conversation = manager.open_conversation(None).await.unwrap();
    let mut transport = conversation.text_transport().unwrap();

    let response = transport.query("hello").await.unwrap();
    assert_eq!(response, "Hello there");

    let streams = backend.streams();
    assert_eq!(streams.len(), 2);
    assert_eq!(streams[0].config(), streams[1].config());
    assert!(!streams[0].is_open(), "first stream must be discarded");
}

#[tokio::test]
async fn test_second_stream_end_is_protocol_error() {
    let backend = ScriptedBackend::v1alpha2(vec![
        StreamScript::EndImmediately,
        StreamScript::EndImmediately,
    ]);
    let manager = manager(&backend);

    let conversation = manager.open_conversation(None).await.unwrap();
    let mut transport = conversation.text_transport().unwrap();

    let err = transport.query("hello").await.unwrap_err();
    assert_eq!(
        err,
        AssistantError::Protocol("no response after retry".to_string())
    );
    assert_eq!(backend.streams().len(), 2);
    assert!(manager.dialog_state().is_new_conversation);
}

#[tokio::test]
async fn test_empty_frame_is_protocol_error() {
    let backend =
        ScriptedBackend::v1alpha2(vec![StreamScript::Respond(vec![InboundFrame::default()])]);
    let manager = manager(&backend);

    let conversation = manager.open_conversation(None).await.unwrap();
    let mut transport = conversation.text_transport().unwrap();

    let err = transport.query("hello").await.unwrap_err();
    assert_eq!(err, AssistantError::Protocol("empty response".to_string()));
}

#[tokio::test]
async fn test_remote_error_frame_is_protocol_error() {
    let backend = ScriptedBackend::v1alpha2(vec![StreamScript::Respond(vec![
        InboundFrame::remote_error(3, "Invalid 'audio_out_config'"),
    ])]);
    let manager = manager(&backend);

    let conversation = manager.open_conversation(None).await.unwrap();
    let mut transport = conversation.text_transport().unwrap();

    match transport.query("hello").await {
        Err(AssistantError::Protocol(message)) => {
            assert!(message.contains("Invalid 'audio_out_config'"));
        }
        other => panic!("expected protocol error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_stream_failure_is_not_retried() {
    let backend = ScriptedBackend::v1alpha2(vec![StreamScript::Fail(
        AssistantError::Auth("Unauthenticated".to_string()),
    )]);
    let manager = manager(&backend);

    let conversation = manager.open_conversation(None).await.unwrap();
    let mut transport = conversation.text_transport().unwrap();

    let err = transport.query("hello").await.unwrap_err();
    assert!(matches!(err, AssistantError::Auth(_)));
    assert_eq!(backend.streams().len(), 1);
}

#[tokio::test]
async fn test_server_volume_updates_audio_settings() {
    let backend = ScriptedBackend::v1alpha2(vec![
        StreamScript::Respond(vec![InboundFrame::dialog_state(DialogStateOut {
            continuation_token: bytes::Bytes::from_static(&[0x05]),
            volume_pct: 40,
            display_text: "Volume set to 40".to_string(),
            ..Default::default()
        })]),
        StreamScript::Respond(vec![answer("Ok", &[0x06])]),
    ]);
    let manager = manager(&backend);

    let conversation = manager.open_conversation(None).await.unwrap();
    let mut transport = conversation.text_transport().unwrap();

    transport.query("set volume to 40").await.unwrap();
    assert_eq!(manager.audio_settings().out_volume_pct(), 40);

    transport.query("thanks").await.unwrap();
    let config = backend.stream(1).config().unwrap();
    assert_eq!(config.audio_out.volume_pct, 40);
}

#[tokio::test]
async fn test_text_query_rejected_on_v1alpha1() {
    let backend = ScriptedBackend::new(ProtocolRevision::V1Alpha1, vec![]);
    let manager = manager(&backend);

    let conversation = manager.open_conversation(None).await.unwrap();
    let mut transport = conversation.text_transport().unwrap();

    let err = transport.query("hello").await.unwrap_err();
    assert!(matches!(err, AssistantError::Protocol(msg) if msg.contains("v1alpha1")));

    // Rejected before any stream is opened
    assert!(backend.streams().is_empty());
    assert!(transport.last_query().is_none());
}
