//! Episodic training loop.
mod config;
use crate::{
    error::OcrlError,
    explorer::{EpsilonGreedy, Explorer, GaussianNoise},
    record::{Record, RecordValue, Recorder},
    registry::BufferKind,
    replay_buffer::{ReplayBuffer, ReplayBufferConfig},
    Action, ActionType, Algorithm, Env,
};
use anyhow::Result;
use chrono::Local;
pub use config::TrainerConfig;
use log::{debug, info};
use rand::{rngs::StdRng, SeedableRng};

/// Phase of [`SerialTrainer`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TrainerState {
    /// Filling the buffer without learning.
    Warmup,

    /// Collecting transitions and learning.
    Training,

    /// Running episodes without exploration.
    Evaluating,
}

#[cfg_attr(doc, aquamarine::aquamarine)]
/// Runs episodes of an environment, fills a transition buffer and invokes
/// learning steps of an [`Algorithm`].
///
/// ```mermaid
/// stateDiagram-v2
///     [*] --> Warmup
///     Warmup --> Training: buffer size >= buffer_warm_size
///     Training --> Evaluating: every eval_interval episodes
///     Evaluating --> Training
///     Training --> [*]: max_train_episode episodes
/// ```
///
/// During training, a learning step is done after an environment step if
/// the buffer holds more than `buffer_warm_size` transitions and the step
/// count within the episode is a multiple of `learning_interval`.
/// Learning steps are numbered from 1.
pub struct SerialTrainer<E: Env> {
    config: TrainerConfig,
    env: E,
    buffer: ReplayBuffer,
    explorer: Explorer,
    rng: StdRng,
    state: TrainerState,
    global_steps: usize,
    iteration: usize,
    warmup_episodes: usize,
    train_episodes: usize,
}

impl<E: Env> SerialTrainer<E> {
    /// Builds a trainer with the buffer of the given kind.
    ///
    /// `act_dim` is the dimension of continuous actions; it is ignored for
    /// discrete actions, which are stored in a single element.
    pub fn build(
        config: TrainerConfig,
        env: E,
        buffer_kind: BufferKind,
        act_dim: usize,
    ) -> Result<Self> {
        config.validate()?;
        let act_dim = match config.action_type {
            ActionType::Continuous => act_dim,
            ActionType::Discrete { .. } => 1,
        };
        let buffer_config = ReplayBufferConfig::default()
            .capacity(config.buffer_max_size)
            .seed(config.seed)
            .obs_dim(env.obs_dim())
            .act_dim(act_dim);
        let buffer = buffer_kind.build(&buffer_config)?;
        let explorer = Explorer::new(
            GaussianNoise::new(config.noise)?,
            EpsilonGreedy::new(config.epsilon.clone()),
        );
        let rng = StdRng::seed_from_u64(config.seed.wrapping_add(1));

        Ok(Self {
            config,
            env,
            buffer,
            explorer,
            rng,
            state: TrainerState::Warmup,
            global_steps: 0,
            iteration: 0,
            warmup_episodes: 0,
            train_episodes: 0,
        })
    }

    /// Current phase.
    pub fn state(&self) -> TrainerState {
        self.state
    }

    /// The transition buffer.
    pub fn buffer(&self) -> &ReplayBuffer {
        &self.buffer
    }

    /// The environment.
    pub fn env(&self) -> &E {
        &self.env
    }

    /// Number of environment steps in warm-up and training episodes.
    pub fn global_steps(&self) -> usize {
        self.global_steps
    }

    /// Number of learning steps done so far.
    pub fn iteration(&self) -> usize {
        self.iteration
    }

    /// Number of warm-up episodes done so far.
    pub fn warmup_episodes(&self) -> usize {
        self.warmup_episodes
    }

    /// Number of training episodes done so far.
    pub fn train_episodes(&self) -> usize {
        self.train_episodes
    }

    /// Applies exploration to an action of the policy.
    ///
    /// Continuous actions are clipped to `[-1, 1]` in any case.
    pub fn process_action(&mut self, act: Action, explore: bool) -> Result<Action> {
        let action_num = match (&self.config.action_type, &act) {
            (ActionType::Continuous, Action::Continuous(_)) => 0,
            (ActionType::Discrete { action_num }, Action::Discrete(_)) => *action_num,
            (action_type, act) => {
                return Err(OcrlError::InvalidConfig(format!(
                    "action {:?} does not match action type {:?}",
                    act, action_type
                ))
                .into())
            }
        };

        if explore {
            Ok(self
                .explorer
                .explore(act, action_num, self.global_steps, &mut self.rng))
        } else {
            Ok(self.explorer.exploit(act))
        }
    }

    /// Runs an episode with exploration and stores its transitions.
    ///
    /// Learning steps are done only if `learn` is `true`. Returns the sum of
    /// unscaled rewards.
    pub fn run_episode<A: Algorithm>(
        &mut self,
        alg: &mut A,
        recorder: &mut dyn Recorder,
        learn: bool,
    ) -> Result<f32> {
        let mut obs = self.env.reset()?;
        let mut steps = 0;
        let mut episode_reward = 0f32;

        loop {
            let act = alg.predict(&obs)?;
            let act = self.process_action(act, true)?;
            let step = self.env.step(&act)?;
            steps += 1;
            self.global_steps += 1;
            episode_reward += step.reward;

            self.buffer.store(
                &obs,
                &act.to_vec(),
                self.config.reward_scale * step.reward,
                &step.obs,
                step.is_done,
            )?;

            if learn
                && self.buffer.len() > self.config.buffer_warm_size
                && steps % self.config.learning_interval == 0
            {
                self.learn(alg, recorder)?;
            }

            obs = step.obs;
            if step.is_done || steps >= self.config.episode_length {
                break;
            }
        }

        Ok(episode_reward)
    }

    fn learn<A: Algorithm>(&mut self, alg: &mut A, recorder: &mut dyn Recorder) -> Result<()> {
        self.iteration += 1;
        let batch = self.buffer.sample_batch(self.config.batch_size)?;
        let mut record = alg.local_update(&batch, self.iteration)?;
        record.insert("iteration", RecordValue::Scalar(self.iteration as f32));
        recorder.store(record);
        Ok(())
    }

    /// Runs episodes until the buffer holds `buffer_warm_size` transitions.
    pub fn warmup<A: Algorithm>(&mut self, alg: &mut A) -> Result<()> {
        self.state = TrainerState::Warmup;
        info!(
            "Start warm-up, target buffer size {}",
            self.config.buffer_warm_size
        );
        let mut recorder = crate::record::NullRecorder::new();

        while self.buffer.len() < self.config.buffer_warm_size {
            self.run_episode(alg, &mut recorder, false)?;
            self.warmup_episodes += 1;
        }

        info!(
            "Finished warm-up: {} episodes, buffer size {}",
            self.warmup_episodes,
            self.buffer.len()
        );
        Ok(())
    }

    /// Runs `num_eval_episode` episodes without exploration and returns the
    /// mean of the episode rewards. Transitions are not stored.
    pub fn eval<A: Algorithm>(&mut self, alg: &mut A) -> Result<f32> {
        let prev_state = self.state;
        self.state = TrainerState::Evaluating;
        let mut total_reward = 0f32;

        for _ in 0..self.config.num_eval_episode {
            let mut obs = self.env.reset()?;
            let mut steps = 0;
            loop {
                let act = alg.predict(&obs)?;
                let act = self.process_action(act, false)?;
                let step = self.env.step(&act)?;
                steps += 1;
                total_reward += step.reward;
                if self.config.is_render {
                    self.env.render()?;
                }
                obs = step.obs;
                if step.is_done || steps >= self.config.episode_length {
                    break;
                }
            }
        }

        self.state = prev_state;
        Ok(total_reward / self.config.num_eval_episode.max(1) as f32)
    }

    /// Trains the algorithm.
    ///
    /// Warm-up runs first, then blocks of `eval_interval` training episodes
    /// alternate with evaluation until `max_train_episode` training episodes
    /// are done. Diagnostics of learning steps are stored in `recorder`,
    /// which is flushed and receives a summary after every evaluation.
    pub fn train<A: Algorithm>(&mut self, alg: &mut A, recorder: &mut dyn Recorder) -> Result<()> {
        self.warmup(alg)?;
        self.state = TrainerState::Training;

        while self.train_episodes < self.config.max_train_episode {
            let n = self
                .config
                .eval_interval
                .min(self.config.max_train_episode - self.train_episodes);
            let mut train_reward = 0f32;
            for _ in 0..n {
                train_reward += self.run_episode(alg, recorder, true)?;
                self.train_episodes += 1;
                debug!(
                    "Episode {} done, iteration {}",
                    self.train_episodes, self.iteration
                );
            }
            train_reward /= n as f32;

            let eval_reward = self.eval(alg)?;
            info!(
                "Episode: {}, train reward: {:.3}, eval reward: {:.3}",
                self.train_episodes, train_reward, eval_reward
            );

            recorder.flush(self.train_episodes as i64);
            recorder.write(Record::from_slice(&[
                ("episode", RecordValue::Scalar(self.train_episodes as f32)),
                ("train_reward", RecordValue::Scalar(train_reward)),
                ("eval_reward", RecordValue::Scalar(eval_reward)),
                ("iteration", RecordValue::Scalar(self.iteration as f32)),
                ("buffer_size", RecordValue::Scalar(self.buffer.len() as f32)),
                ("datetime", RecordValue::DateTime(Local::now())),
            ]));
        }

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        record::BufferedRecorder, replay_buffer::TransitionBatch, Step,
    };
    use test_log::test;

    /// An environment of fixed-length episodes rewarding the action.
    struct CountingEnv {
        t: usize,
        horizon: usize,
        n_resets: usize,
        n_renders: usize,
    }

    impl CountingEnv {
        fn new(horizon: usize) -> Self {
            Self {
                t: 0,
                horizon,
                n_resets: 0,
                n_renders: 0,
            }
        }
    }

    impl Env for CountingEnv {
        fn obs_dim(&self) -> usize {
            1
        }

        fn reset(&mut self) -> Result<Vec<f32>> {
            self.t = 0;
            self.n_resets += 1;
            Ok(vec![0.0])
        }

        fn step(&mut self, act: &Action) -> Result<Step> {
            self.t += 1;
            let reward = match act {
                Action::Continuous(a) => a[0],
                Action::Discrete(a) => *a as f32,
            };
            Ok(Step::new(vec![self.t as f32], reward, self.t >= self.horizon))
        }

        fn render(&mut self) -> Result<()> {
            self.n_renders += 1;
            Ok(())
        }
    }

    /// Records the number of predictions made before each update.
    struct MockAlgorithm {
        action: Action,
        n_predicts: usize,
        updates: Vec<(usize, usize)>,
    }

    impl MockAlgorithm {
        fn new(action: Action) -> Self {
            Self {
                action,
                n_predicts: 0,
                updates: vec![],
            }
        }
    }

    impl Algorithm for MockAlgorithm {
        type UpdateInfo = usize;

        fn predict(&mut self, _obs: &[f32]) -> Result<Action> {
            self.n_predicts += 1;
            Ok(self.action.clone())
        }

        fn get_remote_update_info(
            &mut self,
            batch: &TransitionBatch,
            iteration: usize,
        ) -> Result<(Record, usize)> {
            assert_eq!(batch.len(), 4);
            Ok((Record::from_scalar("loss", 0.0), iteration))
        }

        fn remote_update(&mut self, iteration: usize) -> Result<()> {
            self.updates.push((self.n_predicts, iteration));
            Ok(())
        }
    }

    fn config() -> TrainerConfig {
        TrainerConfig::default()
            .batch_size(4)
            .buffer_warm_size(10)
            .buffer_max_size(20)
            .episode_length(5)
            .noise(0.0)
            .max_train_episode(3)
            .eval_interval(2)
    }

    #[test]
    fn test_warmup_then_first_learning_step() -> Result<()> {
        let env = CountingEnv::new(100);
        let mut trainer = SerialTrainer::build(config(), env, BufferKind::ReplayBuffer, 1)?;
        let mut alg = MockAlgorithm::new(Action::Continuous(vec![0.5]));
        let mut recorder = BufferedRecorder::new();
        assert_eq!(trainer.state(), TrainerState::Warmup);

        trainer.warmup(&mut alg)?;
        assert_eq!(trainer.state(), TrainerState::Warmup);
        assert_eq!(trainer.warmup_episodes(), 2);
        assert_eq!(trainer.buffer().len(), 10);
        assert!(alg.updates.is_empty());

        trainer.run_episode(&mut alg, &mut recorder, true)?;
        // The 5th step of the first training episode is the 15th step overall.
        assert_eq!(alg.updates, vec![(15, 1)]);
        assert_eq!(trainer.iteration(), 1);
        assert_eq!(trainer.buffer().len(), 15);
        assert_eq!(recorder.iter_stored().count(), 1);
        Ok(())
    }

    #[test]
    fn test_train_enters_training_after_warmup() -> Result<()> {
        let env = CountingEnv::new(100);
        let config = config().max_train_episode(1).eval_interval(1);
        let mut trainer = SerialTrainer::build(config, env, BufferKind::ReplayBuffer, 1)?;
        let mut alg = MockAlgorithm::new(Action::Continuous(vec![0.5]));
        let mut recorder = BufferedRecorder::new();

        trainer.train(&mut alg, &mut recorder)?;
        assert_eq!(trainer.warmup_episodes(), 2);
        assert_eq!(alg.updates, vec![(15, 1)]);
        assert_eq!(trainer.state(), TrainerState::Training);

        // Evaluation restores the phase it was called from.
        trainer.eval(&mut alg)?;
        assert_eq!(trainer.state(), TrainerState::Training);
        Ok(())
    }

    #[test]
    fn test_train_blocks() -> Result<()> {
        let env = CountingEnv::new(100);
        let config = config().num_eval_episode(2).is_render(true);
        let mut trainer = SerialTrainer::build(config, env, BufferKind::ReplayBuffer, 1)?;
        let mut alg = MockAlgorithm::new(Action::Continuous(vec![2.0]));
        let mut recorder = BufferedRecorder::new();

        trainer.train(&mut alg, &mut recorder)?;

        assert_eq!(trainer.train_episodes(), 3);
        assert_eq!(trainer.iteration(), 3);
        assert_eq!(trainer.global_steps(), 25);
        // Evaluation after episodes 2 and 3.
        assert_eq!(recorder.n_flushes(), 2);
        let summaries = recorder.iter().collect::<Vec<_>>();
        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[0].get_scalar("episode")?, 2.0);
        assert_eq!(summaries[1].get_scalar("episode")?, 3.0);
        // Actions are clipped, so each step is rewarded with 1.
        assert_eq!(summaries[1].get_scalar("eval_reward")?, 5.0);
        assert_eq!(summaries[1].get_scalar("train_reward")?, 5.0);
        // 2 warm-up, 3 training and 2 x 2 evaluation episodes.
        assert_eq!(trainer.env().n_resets, 9);
        assert_eq!(trainer.env().n_renders, 20);
        assert_eq!(trainer.state(), TrainerState::Training);
        Ok(())
    }

    #[test]
    fn test_reward_scale() -> Result<()> {
        let env = CountingEnv::new(3);
        let config = config().reward_scale(0.5).buffer_warm_size(3);
        let mut trainer = SerialTrainer::build(config, env, BufferKind::ReplayBuffer, 1)?;
        let mut alg = MockAlgorithm::new(Action::Continuous(vec![0.8]));
        let mut recorder = BufferedRecorder::new();

        let reward = trainer.run_episode(&mut alg, &mut recorder, false)?;
        assert!((reward - 2.4).abs() < 1e-6);
        let transitions = trainer.buffer().transitions();
        assert_eq!(transitions.len(), 3);
        assert!(transitions.iter().all(|tr| (tr.reward - 0.4).abs() < 1e-6));
        assert!(transitions[2].is_done);
        assert!(!transitions[1].is_done);
        Ok(())
    }

    #[test]
    fn test_discrete_actions() -> Result<()> {
        let env = CountingEnv::new(5);
        let config = config()
            .action_type(ActionType::Discrete { action_num: 3 })
            .epsilon(crate::explorer::EpsilonGreedyConfig::default().eps_start(1.0).eps_end(1.0));
        let mut trainer = SerialTrainer::build(config, env, BufferKind::ReplayBuffer, 7)?;
        let mut alg = MockAlgorithm::new(Action::Discrete(1));

        trainer.warmup(&mut alg)?;
        let transitions = trainer.buffer().transitions();
        assert!(transitions.iter().all(|tr| tr.act.len() == 1 && tr.act[0] < 3.0));

        // No exploration in evaluation.
        assert_eq!(trainer.process_action(Action::Discrete(1), false)?, Action::Discrete(1));
        Ok(())
    }

    #[test]
    fn test_action_type_mismatch() -> Result<()> {
        let env = CountingEnv::new(5);
        let mut trainer = SerialTrainer::build(config(), env, BufferKind::ReplayBuffer, 1)?;
        let err = trainer.process_action(Action::Discrete(0), true).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<OcrlError>(),
            Some(OcrlError::InvalidConfig(_))
        ));
        Ok(())
    }

    #[test]
    fn test_invalid_config_rejected() {
        let env = CountingEnv::new(5);
        let config = config().buffer_warm_size(30);
        assert!(SerialTrainer::build(config, env, BufferKind::ReplayBuffer, 1).is_err());
    }
}
