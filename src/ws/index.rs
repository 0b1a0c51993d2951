//! WebSocket endpoint feeding the push dispatcher.

use std::sync::Arc;

use actix_web::{web, Error, HttpRequest, HttpResponse};
use actix_ws::{handle, Message};
use futures::StreamExt;
use uuid::Uuid;

use crate::dispatch::{self, PushDispatcher};
use crate::protocol::{ClientMsg, ServerMsg};

pub async fn ws_index(
    req: HttpRequest,
    body: web::Payload,
    dispatcher: web::Data<Arc<PushDispatcher>>,
) -> Result<HttpResponse, Error> {
    let (response, mut session, mut ws_stream) = handle(&req, body)?;
    let dispatcher = dispatcher.get_ref().clone();
    let socket_id = Uuid::new_v4();

    actix::spawn(async move {
        // Bound to a participant by the first successful register event.
        let mut registered: Option<Uuid> = None;

        while let Some(frame) = ws_stream.next().await {
            match frame {
                Ok(Message::Text(text)) => match serde_json::from_str::<ClientMsg>(&text) {
                    Ok(msg) => {
                        dispatcher
                            .handle_event(socket_id, &mut session, &mut registered, msg)
                            .await;
                    }
                    Err(e) => {
                        log::debug!("malformed client event on {socket_id}: {e}");
                        dispatch::send(
                            &mut session,
                            &ServerMsg::Error {
                                message: format!("malformed event payload: {e}"),
                            },
                        )
                        .await;
                    }
                },
                Ok(Message::Ping(bytes)) => {
                    let _ = session.pong(&bytes).await;
                }
                Ok(Message::Close(_)) => break,
                Ok(_) => {}
                Err(e) => {
                    log::debug!("WS protocol error on {socket_id}: {e}");
                    break;
                }
            }
        }

        if let Some(pid) = registered {
            dispatcher.disconnect(pid).await;
        }
        log::info!("WS closed (socket {socket_id})");
    });

    Ok(response)
}
