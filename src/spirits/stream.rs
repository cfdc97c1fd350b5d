//! 流式输出
//!
//! 生产者（后台任务）把上游分片写入有界 channel，结束时发送 StreamEvent::Done；
//! 消费者丢弃 SpiritStream 即取消：生产者在下一次发送或等待上游时发现 channel 已关闭并退出。

use futures_util::StreamExt;
use tokio::sync::mpsc;

use crate::conversation::Message;
use crate::llm::{LlmClient, LlmError};

/// channel 容量：消费者停止读取时，生产者最多领先这么多分片
pub(crate) const STREAM_BUFFER: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    Fragment(String),
    /// 显式结束信号；channel 关闭但未收到 Done 说明生产者异常退出
    Done,
}

/// 一次流式对话的输出，不可重启
#[derive(Debug)]
pub struct SpiritStream {
    rx: mpsc::Receiver<StreamEvent>,
}

impl SpiritStream {
    pub(crate) fn new(rx: mpsc::Receiver<StreamEvent>) -> Self {
        Self { rx }
    }

    /// 下一个事件；None 表示 channel 已关闭
    pub async fn next(&mut self) -> Option<StreamEvent> {
        self.rx.recv().await
    }

    /// 读完整个流：返回全部分片与是否收到 Done
    pub async fn collect(mut self) -> (Vec<String>, bool) {
        let mut fragments = Vec::new();
        while let Some(event) = self.next().await {
            match event {
                StreamEvent::Fragment(text) => fragments.push(text),
                StreamEvent::Done => return (fragments, true),
            }
        }
        (fragments, false)
    }
}

pub(crate) enum PumpOutcome {
    Finished,
    ConsumerGone,
    Failed { err: LlmError, emitted: usize },
}

/// 从一个客户端读取上游流并转发到 channel；空分片跳过
pub(crate) async fn pump(
    client: &dyn LlmClient,
    conversation: &[Message],
    tx: &mpsc::Sender<StreamEvent>,
) -> PumpOutcome {
    let mut upstream = match client.complete_stream(conversation).await {
        Ok(stream) => stream,
        Err(err) => return PumpOutcome::Failed { err, emitted: 0 },
    };

    let mut emitted = 0;
    loop {
        let item = tokio::select! {
            item = upstream.next() => item,
            _ = tx.closed() => return PumpOutcome::ConsumerGone,
        };
        match item {
            None => return PumpOutcome::Finished,
            Some(Ok(fragment)) if fragment.is_empty() => continue,
            Some(Ok(fragment)) => {
                if tx.send(StreamEvent::Fragment(fragment)).await.is_err() {
                    return PumpOutcome::ConsumerGone;
                }
                emitted += 1;
            }
            Some(Err(err)) => return PumpOutcome::Failed { err, emitted },
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::llm::MockLlmClient;
    use crate::spirits::{replies, ClientPair, SpiritAgent, REAPER};

    fn reaper(primary: Arc<MockLlmClient>, fallback: Option<Arc<MockLlmClient>>) -> Arc<SpiritAgent> {
        Arc::new(SpiritAgent::new(
            REAPER,
            ClientPair::new(primary, fallback.map(|f| f as Arc<dyn LlmClient>)),
        ))
    }

    #[tokio::test]
    async fn test_stream_forwards_fragments_then_done() {
        let primary = Arc::new(MockLlmClient::streaming(["Your ", "", "time ", "has come."]));
        let (fragments, done) = reaper(primary, None)
            .stream_chat(vec![Message::user("When will I die?")])
            .collect()
            .await;

        assert_eq!(fragments, vec!["Your ", "time ", "has come."]);
        assert!(done);
    }

    #[tokio::test]
    async fn test_stream_restarts_on_fallback_before_first_fragment() {
        let primary = Arc::new(MockLlmClient::failing(LlmError::Api("401".into())));
        let fallback = Arc::new(MockLlmClient::streaming(["From ", "the other side."]));
        let (fragments, done) = reaper(primary.clone(), Some(fallback.clone()))
            .stream_chat(vec![Message::user("hi")])
            .collect()
            .await;

        assert_eq!(fragments, vec!["From ", "the other side."]);
        assert!(done);
        assert_eq!(primary.calls(), 1);
        assert_eq!(fallback.calls(), 1);
    }

    #[tokio::test]
    async fn test_stream_mid_failure_does_not_duplicate() {
        let primary = Arc::new(MockLlmClient::failing_after(
            ["Your "],
            LlmError::Api("connection reset".into()),
        ));
        let fallback = Arc::new(MockLlmClient::streaming(["never sent"]));
        let (fragments, done) = reaper(primary, Some(fallback.clone()))
            .stream_chat(vec![Message::user("hi")])
            .collect()
            .await;

        assert_eq!(fragments, vec!["Your ".to_string(), replies::VOICE_FADES.to_string()]);
        assert!(done);
        assert_eq!(fallback.calls(), 0);
    }

    #[tokio::test]
    async fn test_stream_both_fail_yields_single_fragment() {
        let primary = Arc::new(MockLlmClient::failing(LlmError::Api("500".into())));
        let fallback = Arc::new(MockLlmClient::failing(LlmError::Api("500".into())));
        let (fragments, done) = reaper(primary.clone(), Some(fallback.clone()))
            .stream_chat(vec![Message::user("hi")])
            .collect()
            .await;

        assert_eq!(fragments, vec![replies::VOICE_FADES]);
        assert!(done);
        assert_eq!(primary.calls() + fallback.calls(), 2);
    }

    #[tokio::test]
    async fn test_stream_unexpected_error_message() {
        let primary = Arc::new(MockLlmClient::failing(LlmError::Unexpected("bad".into())));
        let (fragments, _) = reaper(primary, None)
            .stream_chat(vec![Message::user("hi")])
            .collect()
            .await;
        assert_eq!(fragments, vec![replies::CONNECTION_SEVERED]);
    }

    #[tokio::test]
    async fn test_dropping_stream_stops_producer() {
        let fragments: Vec<String> = (0..(STREAM_BUFFER * 4)).map(|i| format!("{} ", i)).collect();
        let primary = Arc::new(MockLlmClient::streaming(fragments));
        let agent = reaper(primary, None);
        let mut stream = agent.stream_chat(vec![Message::user("hi")]);

        assert_eq!(stream.next().await, Some(StreamEvent::Fragment("0 ".into())));
        drop(stream);

        // 生产者持有 Agent 的一个 Arc；退出后引用计数回到 1
        tokio::time::timeout(std::time::Duration::from_secs(1), async {
            while Arc::strong_count(&agent) > 1 {
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("producer should stop once the consumer is gone");
    }
}
