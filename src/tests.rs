//! Integration tests: a real session against an in-process loopback SMSC.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;

use crate::connection::{FrameReader, FrameWriter, Inbound};
use crate::message::ShortMessage;
use crate::pdu::{CommandId, CommandStatus, FieldName, Pdu, Value};
use crate::session::{Handler, Session, SessionConfig, SessionStatus, SmppError};
use crate::text::Text;

/// Per-request responder: inspect the request, produce zero or more replies.
type Responder = Arc<dyn Fn(&Pdu) -> Vec<Pdu> + Send + Sync>;

#[derive(Clone)]
struct ServerOptions {
    bind_status: u32,
    /// Artificial delay before responder replies go out.
    delay: Option<Duration>,
}

impl Default for ServerOptions {
    fn default() -> ServerOptions {
        ServerOptions {
            bind_status: 0,
            delay: None,
        }
    }
}

struct TestServer {
    addr: String,
    /// Every PDU the server read, in arrival order.
    received: Arc<Mutex<Vec<Pdu>>>,
}

impl TestServer {
    async fn start(opts: ServerOptions, responder: Responder) -> TestServer {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let received = Arc::new(Mutex::new(Vec::new()));
        let log = received.clone();

        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let (read_half, write_half) = stream.into_split();
                let mut reader = FrameReader::new(read_half);
                let writer = Arc::new(tokio::sync::Mutex::new(FrameWriter::new(write_half)));
                let opts = opts.clone();
                let responder = responder.clone();
                let log = log.clone();
                tokio::spawn(async move {
                    loop {
                        let pdu = match reader.read().await {
                            Ok(Inbound::Frame(pdu)) => pdu,
                            _ => return,
                        };
                        log.lock().unwrap().push(pdu.clone());

                        match pdu.id() {
                            Some(
                                CommandId::BindTransmitter
                                | CommandId::BindReceiver
                                | CommandId::BindTransceiver,
                            ) => {
                                let mut resp = pdu.response().unwrap();
                                resp.command_status = opts.bind_status;
                                resp.fields.set_str(FieldName::SystemId, "loopback");
                                let _ = writer.lock().await.write(&resp).await;
                            }
                            Some(CommandId::EnquireLink | CommandId::Unbind) => {
                                let resp = pdu.response().unwrap();
                                let _ = writer.lock().await.write(&resp).await;
                            }
                            _ => {
                                let replies = responder(&pdu);
                                let writer = writer.clone();
                                let delay = opts.delay;
                                tokio::spawn(async move {
                                    if let Some(delay) = delay {
                                        tokio::time::sleep(delay).await;
                                    }
                                    for reply in replies {
                                        let _ = writer.lock().await.write(&reply).await;
                                    }
                                });
                            }
                        }
                    }
                });
            }
        });

        TestServer { addr, received }
    }

    /// Wait until `predicate` matches one received PDU, or panic.
    async fn expect_received(&self, what: &str, predicate: impl Fn(&Pdu) -> bool) -> Pdu {
        for _ in 0..100 {
            if let Some(pdu) = self
                .received
                .lock()
                .unwrap()
                .iter()
                .find(|pdu| predicate(pdu))
            {
                return pdu.clone();
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("server never received {what}");
    }
}

fn submit_responder() -> Responder {
    let count = AtomicUsize::new(0);
    Arc::new(move |pdu| {
        if pdu.id() != Some(CommandId::SubmitSm) {
            return Vec::new();
        }
        let n = count.fetch_add(1, Ordering::Relaxed);
        let mut resp = pdu.response().unwrap();
        resp.fields.set_str(FieldName::MessageId, &format!("foobar{n}"));
        vec![resp]
    })
}

fn config(addr: &str) -> SessionConfig {
    SessionConfig::new(addr, "client", "secret").enquire_link(Duration::ZERO)
}

fn lorem() -> &'static str {
    "Lorem ipsum dolor sit amet, consectetur adipiscing elit. Nam consequat nisl enim, \
     vel finibus neque aliquet sit amet. Interdum et malesuada fames ac ante ipsum \
     primis in faucibus."
}

#[tokio::test]
async fn submit_single_message() {
    let server = TestServer::start(
        ServerOptions::default(),
        Arc::new(|pdu| {
            let mut resp = pdu.response().unwrap();
            resp.fields.set_str(FieldName::MessageId, "foobar");
            vec![resp]
        }),
    )
    .await;

    let session = Session::connect(config(&server.addr)).await.unwrap();
    assert_eq!(session.status(), SessionStatus::Connected);

    let msg = ShortMessage::new("root", "foobar", Text::Raw(b"Lorem ipsum".to_vec()));
    let result = session.submit(&msg).await.unwrap();
    assert_eq!(result.message_id, "foobar");

    let seen = server
        .expect_received("submit_sm", |p| p.id() == Some(CommandId::SubmitSm))
        .await;
    assert_eq!(seen.fields.get_u8(FieldName::EsmClass), 0);
    assert_eq!(seen.fields.get_u8(FieldName::SmLength), 11);
    assert_eq!(seen.fields.get_str(FieldName::ShortMessage), "Lorem ipsum");

    session.unbind().await.unwrap();
    assert_eq!(session.status(), SessionStatus::Closed);
}

#[tokio::test]
async fn long_message_is_two_concatenated_parts() {
    let server = TestServer::start(ServerOptions::default(), submit_responder()).await;
    let session = Session::connect(config(&server.addr)).await.unwrap();

    let msg = ShortMessage::new("root", "foobar", Text::Gsm7(lorem().into()));
    let parts = session.submit_long(&msg).await.unwrap();
    assert_eq!(parts.len(), 2);
    assert_eq!(parts[0].message_id, "foobar0");
    assert_eq!(parts[1].message_id, "foobar1");

    let frames: Vec<Pdu> = server
        .received
        .lock()
        .unwrap()
        .iter()
        .filter(|p| p.id() == Some(CommandId::SubmitSm))
        .cloned()
        .collect();
    assert_eq!(frames.len(), 2);

    let mut references = Vec::new();
    let mut part_numbers = Vec::new();
    let mut text = Vec::new();
    for frame in &frames {
        assert_eq!(frame.fields.get_u8(FieldName::EsmClass), 0x40);
        let Some(Value::Udh(udh)) = frame.fields.get(FieldName::GsmUserData) else {
            panic!("part without UDH");
        };
        let (reference, total, part) = udh.concatenation();
        assert_eq!(total, 2);
        references.push(reference);
        part_numbers.push(part);
        // sm_length covers the UDH length octet, the IEs and the payload
        let payload = frame.fields.get_str(FieldName::ShortMessage);
        assert_eq!(
            frame.fields.get_u8(FieldName::SmLength) as usize,
            udh.len() + 1 + payload.len()
        );
        text.push(payload);
    }
    assert_eq!(references[0], references[1]);
    part_numbers.sort_unstable();
    assert_eq!(part_numbers, [1, 2]);
    assert_eq!(text.concat(), lorem());

    session.close().await;
}

#[tokio::test]
async fn window_limits_concurrent_submits() {
    let server = TestServer::start(
        ServerOptions {
            delay: Some(Duration::from_millis(200)),
            ..ServerOptions::default()
        },
        submit_responder(),
    )
    .await;

    let session = Arc::new(
        Session::connect(
            config(&server.addr)
                .window_size(2)
                .resp_timeout(Duration::from_secs(1)),
        )
        .await
        .unwrap(),
    );

    let mut handles = Vec::new();
    for _ in 0..3 {
        let session = session.clone();
        handles.push(tokio::spawn(async move {
            let msg = ShortMessage::new("root", "foobar", Text::Raw(b"Lorem ipsum".to_vec()));
            session.submit(&msg).await
        }));
    }

    let mut rejected = 0;
    let mut accepted = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => accepted += 1,
            Err(SmppError::MaxWindowSize) => rejected += 1,
            Err(other) => panic!("unexpected error {other:?}"),
        }
    }
    assert_eq!(accepted, 2);
    assert_eq!(rejected, 1);
}

#[tokio::test]
async fn sequences_stay_unique_under_concurrency() {
    let server = TestServer::start(ServerOptions::default(), submit_responder()).await;
    let session = Arc::new(
        Session::connect(config(&server.addr).window_size(0))
            .await
            .unwrap(),
    );

    let mut handles = Vec::new();
    for _ in 0..20 {
        let session = session.clone();
        handles.push(tokio::spawn(async move {
            let msg = ShortMessage::new("root", "foobar", Text::Raw(b"hi".to_vec()));
            session.submit(&msg).await.unwrap()
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let mut sequences: Vec<u32> = server
        .received
        .lock()
        .unwrap()
        .iter()
        .filter(|p| p.id() == Some(CommandId::SubmitSm))
        .map(|p| p.sequence_number)
        .collect();
    let total = sequences.len();
    sequences.sort_unstable();
    sequences.dedup();
    assert_eq!(total, 20);
    assert_eq!(sequences.len(), 20);
}

#[tokio::test]
async fn query_surfaces_message_state() {
    let server = TestServer::start(
        ServerOptions::default(),
        Arc::new(|pdu| {
            let mut resp = pdu.response().unwrap();
            resp.fields
                .set_str(FieldName::MessageId, &pdu.fields.get_str(FieldName::MessageId));
            resp.fields.set_str(FieldName::FinalDate, "");
            resp.fields.set(FieldName::MessageState, Value::Fixed(2));
            resp.fields.set(FieldName::ErrorCode, Value::Fixed(0));
            vec![resp]
        }),
    )
    .await;

    let session = Session::connect(config(&server.addr)).await.unwrap();
    let result = session.query("13", "root", 5, 0).await.unwrap();
    assert_eq!(result.message_id, "13");
    assert_eq!(result.message_state, "DELIVERED");
    assert_eq!(result.state, 2);
}

#[tokio::test]
async fn submit_multi_reports_unsuccessful_destinations() {
    let server = TestServer::start(
        ServerOptions::default(),
        Arc::new(|pdu| {
            if pdu.id() != Some(CommandId::SubmitMulti) {
                return Vec::new();
            }
            let mut resp = pdu.response().unwrap();
            resp.fields.set_str(FieldName::MessageId, "foobar");
            resp.fields.set(FieldName::NoUnsuccess, Value::Fixed(1));
            resp.fields.set(
                FieldName::UnsuccessSme,
                Value::UnsuccessList(vec![crate::pdu::UnsuccessSme {
                    ton: 0,
                    npi: 0,
                    addr: "123".into(),
                    error_code: 0x11,
                }]),
            );
            vec![resp]
        }),
    )
    .await;

    let session = Session::connect(config(&server.addr)).await.unwrap();
    let mut msg = ShortMessage::new("root", "", Text::Raw(b"Lorem ipsum".to_vec()));
    msg.dst_list = vec!["123".into(), "2233".into(), "32322".into(), "4234234".into()];
    msg.distribution_lists = vec!["DistributionList1".into()];

    let result = session.submit_multi(&msg).await.unwrap();
    assert_eq!(result.message_id, "foobar");
    assert_eq!(result.unsuccess.len(), 1);
    assert_eq!(result.unsuccess[0].addr, "123");
    assert_eq!(result.unsuccess[0].error_code, 0x11);

    let seen = server
        .expect_received("submit_multi", |p| p.id() == Some(CommandId::SubmitMulti))
        .await;
    assert_eq!(seen.fields.get_u8(FieldName::NumberOfDests), 5);
}

#[tokio::test]
async fn close_fails_inflight_submit() {
    let server = TestServer::start(
        ServerOptions {
            delay: Some(Duration::from_millis(500)),
            ..ServerOptions::default()
        },
        submit_responder(),
    )
    .await;

    let session = Arc::new(Session::connect(config(&server.addr)).await.unwrap());
    let submitter = session.clone();
    let pending = tokio::spawn(async move {
        let msg = ShortMessage::new("root", "foobar", Text::Raw(b"Lorem ipsum".to_vec()));
        submitter.submit(&msg).await
    });

    tokio::time::sleep(Duration::from_millis(50)).await;
    session.close().await;

    assert!(matches!(pending.await.unwrap(), Err(SmppError::NotConnected)));
    assert!(matches!(
        session
            .submit(&ShortMessage::new("a", "b", Text::Raw(b"x".to_vec())))
            .await,
        Err(SmppError::NotConnected)
    ));
}

#[tokio::test]
async fn rejected_bind_reports_status() {
    let server = TestServer::start(
        ServerOptions {
            bind_status: CommandStatus::BindFailed as u32,
            ..ServerOptions::default()
        },
        submit_responder(),
    )
    .await;

    let err = Session::connect(config(&server.addr)).await.unwrap_err();
    assert!(matches!(err, SmppError::BindFailed(status) if status == 0x0D));
}

#[tokio::test]
async fn response_timeout_leaves_session_usable() {
    let delayed = AtomicUsize::new(0);
    let server = TestServer::start(
        ServerOptions::default(),
        Arc::new(move |pdu| {
            if pdu.id() != Some(CommandId::SubmitSm) {
                return Vec::new();
            }
            // first submit gets no reply at all; later ones answer normally
            if delayed.fetch_add(1, Ordering::Relaxed) == 0 {
                return Vec::new();
            }
            let mut resp = pdu.response().unwrap();
            resp.fields.set_str(FieldName::MessageId, "ok");
            vec![resp]
        }),
    )
    .await;

    let session = Session::connect(
        config(&server.addr).resp_timeout(Duration::from_millis(100)),
    )
    .await
    .unwrap();
    let msg = ShortMessage::new("root", "foobar", Text::Raw(b"hi".to_vec()));

    assert!(matches!(session.submit(&msg).await, Err(SmppError::Timeout)));
    assert_eq!(session.status(), SessionStatus::Connected);
    assert_eq!(session.submit(&msg).await.unwrap().message_id, "ok");
}

#[tokio::test]
async fn unsolicited_deliver_sm_reaches_handler_and_is_acked() {
    let delivered: Arc<Mutex<Vec<Pdu>>> = Arc::new(Mutex::new(Vec::new()));
    let captured = delivered.clone();
    let handler: Handler = Arc::new(move |conn, pdu| {
        let captured = captured.clone();
        Box::pin(async move {
            if let Some(resp) = pdu.response() {
                let _ = conn.send(&resp).await;
            }
            captured.lock().unwrap().push(pdu);
        })
    });

    let server = TestServer::start(
        ServerOptions::default(),
        Arc::new(|pdu| {
            if pdu.id() != Some(CommandId::SubmitSm) {
                return Vec::new();
            }
            let mut resp = pdu.response().unwrap();
            resp.fields.set_str(FieldName::MessageId, "foobar");

            // push a mobile-originated message alongside the response
            let mut deliver = Pdu::new(CommandId::DeliverSm);
            deliver.sequence_number = 4242;
            deliver.fields.set_str(FieldName::ServiceType, "");
            deliver.fields.set(FieldName::SourceAddrTon, Value::Fixed(0));
            deliver.fields.set(FieldName::SourceAddrNpi, Value::Fixed(0));
            deliver.fields.set_str(FieldName::SourceAddr, "447700900001");
            deliver.fields.set(FieldName::DestAddrTon, Value::Fixed(0));
            deliver.fields.set(FieldName::DestAddrNpi, Value::Fixed(0));
            deliver.fields.set_str(FieldName::DestinationAddr, "root");
            deliver.fields.set(FieldName::EsmClass, Value::Fixed(0));
            deliver.fields.set(FieldName::ProtocolId, Value::Fixed(0));
            deliver.fields.set(FieldName::PriorityFlag, Value::Fixed(0));
            deliver.fields.set_str(FieldName::ScheduleDeliveryTime, "");
            deliver.fields.set_str(FieldName::ValidityPeriod, "");
            deliver.fields.set(FieldName::RegisteredDelivery, Value::Fixed(0));
            deliver.fields.set(FieldName::ReplaceIfPresentFlag, Value::Fixed(0));
            deliver.fields.set(FieldName::DataCoding, Value::Fixed(0));
            deliver.fields.set(FieldName::SmDefaultMsgId, Value::Fixed(0));
            deliver.fields.set(FieldName::SmLength, Value::Fixed(2));
            deliver
                .fields
                .set(FieldName::ShortMessage, Value::Sm(Bytes::from_static(b"\x48\x69")));
            vec![resp, deliver]
        }),
    )
    .await;

    let session = Session::connect(config(&server.addr).handler(handler))
        .await
        .unwrap();
    let msg = ShortMessage::new("root", "foobar", Text::Raw(b"hi".to_vec()));
    session.submit(&msg).await.unwrap();

    let ack = server
        .expect_received("deliver_sm_resp", |p| {
            p.id() == Some(CommandId::DeliverSmResp) && p.sequence_number == 4242
        })
        .await;
    assert!(ack.ok());

    let delivered = delivered.lock().unwrap();
    assert_eq!(delivered.len(), 1);
    assert_eq!(delivered[0].fields.get_str(FieldName::ShortMessage), "Hi");
}

#[tokio::test]
async fn keepalive_sends_enquire_link() {
    let server = TestServer::start(ServerOptions::default(), submit_responder()).await;
    let session = Session::connect(
        SessionConfig::new(server.addr.as_str(), "client", "secret")
            .enquire_link(Duration::from_millis(50)),
    )
    .await
    .unwrap();

    server
        .expect_received("enquire_link", |p| p.id() == Some(CommandId::EnquireLink))
        .await;
    assert_eq!(session.status(), SessionStatus::Connected);
}

#[tokio::test]
async fn malformed_body_is_nacked_and_session_survives() {
    let server = TestServer::start(
        ServerOptions::default(),
        Arc::new(|pdu| {
            if pdu.id() != Some(CommandId::SubmitSm) {
                return Vec::new();
            }
            let mut resp = pdu.response().unwrap();
            resp.fields.set_str(FieldName::MessageId, "ok");

            // a deliver_sm whose body has no C-string terminator anywhere
            let mut broken = Pdu::new(CommandId::DeliverSm);
            broken.sequence_number = 777;
            broken.raw_body = Some(Bytes::from_static(b"garbage-without-terminator"));
            vec![broken, resp]
        }),
    )
    .await;

    let session = Session::connect(config(&server.addr)).await.unwrap();
    let msg = ShortMessage::new("root", "foobar", Text::Raw(b"hi".to_vec()));
    assert_eq!(session.submit(&msg).await.unwrap().message_id, "ok");

    let nack = server
        .expect_received("generic_nack", |p| {
            p.id() == Some(CommandId::GenericNack) && p.sequence_number == 777
        })
        .await;
    assert!(!nack.ok());
    assert_eq!(session.status(), SessionStatus::Connected);
}
