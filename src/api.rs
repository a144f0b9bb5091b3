//! Public API (spec.md §6 "Public API"): thin wrappers over the broker
//! (§4.5) and registration state (§4.6).

use std::sync::{Arc, Mutex};

use crate::broker::Broker;
use crate::config::Config;
use crate::error::{AtError, Error, Result};
use crate::pktio::{CommInterface, Hooks, PktioWorker, SolicitedSink, UrcSink};
use crate::query::{self, clock, modem_info, psm, sim};
use crate::registration::{AtData, RegType, RegistrationEvent, RegistrationTracker};
use crate::response::{AtRequest, AtResponse, CommandKind, ResponseLine, TokenTables};
use crate::service_status::{self, ServiceStatus};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ModemInfo {
    pub manufacturer: String,
    pub model: String,
    pub firmware_version: String,
    pub serial_number: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimCardInfo {
    pub iccid: String,
    pub imsi: String,
}

type UrcCallback = Box<dyn Fn(&[u8]) + Send + Sync>;

#[derive(Default)]
struct UrcCallbacks {
    pdn_event: Option<UrcCallback>,
    signal_strength: Option<UrcCallback>,
    generic: Option<UrcCallback>,
    modem_event: Option<UrcCallback>,
}

/// Routes every `UNSOLICITED` line the worker classifies (spec.md §4.4
/// step f): `+CREG`/`+CGREG`/`+CEREG` update registration state and may
/// fire the registration callback; anything else reaches the generic URC
/// callback, since spec.md leaves PDN-event/signal-strength/modem-event
/// line grammars unspecified beyond their registration hooks existing.
struct UrcRouter {
    registration: Arc<RegistrationTracker>,
    callbacks: Arc<Mutex<UrcCallbacks>>,
}

impl UrcSink for UrcRouter {
    fn dispatch(&self, line: &[u8]) {
        let handled = [(b"+CREG".as_slice(), RegType::Creg), (b"+CGREG".as_slice(), RegType::Cgreg), (b"+CEREG".as_slice(), RegType::Cereg)]
            .into_iter()
            .find_map(|(prefix, reg_type)| query::payload(line, prefix).ok().map(|p| (reg_type, p)));

        if let Some((reg_type, payload)) = handled {
            if let Err(e) = self.registration.handle_line(reg_type, true, payload) {
                log::warn!("registration URC parse failed: {e:?}");
            }
            return;
        }

        if let Some(cb) = self.callbacks.lock().unwrap().generic.as_ref() {
            cb(line);
        }
    }
}

fn first_text_line(resp: &AtResponse) -> crate::error::AtResult<Vec<u8>> {
    resp.lines
        .iter()
        .find_map(|l| match l {
            ResponseLine::Text(t) => Some(t.clone()),
            ResponseLine::Raw(_) => None,
        })
        .ok_or(AtError::InvalidData)
}

/// An initialized driver instance (spec.md §6 "Init"/"Cleanup"). A second
/// logical `Init` is not meaningfully representable as a second call on an
/// owned Rust value — each call to [`Context::init`] simply returns an
/// independent context; see DESIGN.md.
pub struct Context {
    broker: Arc<Broker>,
    worker: PktioWorker,
    registration: Arc<RegistrationTracker>,
    callbacks: Arc<Mutex<UrcCallbacks>>,
    config: Config,
}

impl Context {
    pub fn init(comm: Box<dyn CommInterface>, config: Config, tables: TokenTables) -> Result<Self> {
        let comm = Arc::new(Mutex::new(comm));
        let broker = Broker::new(comm.clone(), tables, config.send_timeout);
        let registration = RegistrationTracker::new();
        let callbacks = Arc::new(Mutex::new(UrcCallbacks::default()));
        let urc_router: Arc<dyn UrcSink> = Arc::new(UrcRouter { registration: registration.clone(), callbacks: callbacks.clone() });
        let solicited: Arc<dyn SolicitedSink> = broker.clone();

        let worker = PktioWorker::init(
            comm,
            config.read_buf_len,
            config.recv_timeout,
            config.shutdown_poll,
            solicited,
            urc_router,
            Hooks::default(),
        )
        .map_err(Error::from)?;

        Ok(Self { broker, worker, registration, callbacks, config })
    }

    /// Stops the pktio worker (spec.md §6 "Cleanup"). Consumes the context.
    pub fn cleanup(self) {
        self.worker.shutdown();
    }

    fn send(&self, text: impl Into<Vec<u8>>, kind: CommandKind, prefix: Option<&[u8]>) -> Result<AtResponse> {
        let req = AtRequest::new(text, kind, prefix.map(|p| p.to_vec()), self.config.max_cmd_len).map_err(Error::from)?;
        self.broker.request_with_callback(req, self.config.command_timeout).map_err(Error::from)
    }

    fn query(&self, text: impl Into<Vec<u8>>, prefix: &'static [u8]) -> Result<Vec<u8>> {
        let resp = self.send(text, CommandKind::WithPrefix, Some(prefix))?;
        let line = first_text_line(&resp).map_err(Error::from)?;
        query::payload(&line, prefix).map(|p| p.to_vec()).map_err(Error::from)
    }

    fn unprefixed(&self, text: impl Into<Vec<u8>>) -> Result<Vec<u8>> {
        let resp = self.send(text, CommandKind::WithoutPrefix, None)?;
        first_text_line(&resp).map_err(Error::from)
    }

    pub fn get_modem_info(&self) -> Result<ModemInfo> {
        let manufacturer = modem_info::parse_cgmi(&self.unprefixed("AT+CGMI")?).map_err(Error::from)?;
        let model = modem_info::parse_cgmm(&self.unprefixed("AT+CGMM")?).map_err(Error::from)?;
        let firmware_version = modem_info::parse_cgmr(&self.unprefixed("AT+CGMR")?).map_err(Error::from)?;
        let serial_number = modem_info::parse_cgsn(&self.unprefixed("AT+CGSN")?).map_err(Error::from)?;
        Ok(ModemInfo { manufacturer, model, firmware_version, serial_number })
    }

    pub fn get_sim_card_info(&self) -> Result<SimCardInfo> {
        let iccid = sim::parse_ccid(&self.query("AT+CCID", b"+CCID")?).map_err(Error::from)?;
        let imsi = sim::parse_cimi(&self.unprefixed("AT+CIMI")?).map_err(Error::from)?;
        Ok(SimCardInfo { iccid, imsi })
    }

    pub fn get_sim_card_lock_status(&self) -> Result<sim::SimLockState> {
        sim::parse_cpin(&self.query("AT+CPIN?", b"+CPIN")?).map_err(Error::from)
    }

    pub fn get_hplmn(&self) -> Result<sim::CrsmResult> {
        sim::parse_crsm_hplmn(&self.query("AT+CRSM=176,28478,0,0,255", b"+CRSM")?).map_err(Error::from)
    }

    pub fn get_registered_network(&self) -> Result<AtData> {
        let creg = self.query("AT+CREG?", b"+CREG")?;
        self.registration.handle_line(RegType::Creg, false, &creg).map_err(Error::from)?;
        let snap = self.registration.snapshot();
        if snap.rat == crate::registration::Rat::Invalid {
            return Err(Error::Unknown);
        }
        Ok(snap)
    }

    pub fn get_service_status(&self) -> Result<ServiceStatus> {
        service_status::get_service_status(
            &self.broker,
            &self.registration,
            self.config.no_gsm_network,
            self.config.command_timeout,
            self.config.max_cmd_len,
        )
        .map_err(Error::from)
    }

    pub fn get_network_time(&self) -> Result<clock::ClockResult> {
        clock::parse_cclk(&self.query("AT+CCLK?", b"+CCLK")?).map_err(Error::from)
    }

    pub fn get_ip_address(&self, cid: u8) -> Result<String> {
        let payload = self.query(format!("AT+CGPADDR={cid}"), b"+CGPADDR")?;
        modem_info::parse_cgpaddr(&payload).map_err(Error::from)
    }

    pub fn set_pdn_config(&self, cid: u8, apn: &str) -> Result<()> {
        self.send(format!("AT+CGDCONT={cid},\"IP\",\"{apn}\""), CommandKind::NoResult, None)?;
        Ok(())
    }

    /// `timer` values are raw quoted T3412/T3324 octet strings in the wire
    /// format `decode_t3412`/`decode_t3324` accept (spec.md §4.7 "CPSMS");
    /// this crate does not encode human units back into that form.
    pub fn set_psm_settings(&self, mode: u8, tau: Option<&str>, active_time: Option<&str>) -> Result<()> {
        let tau = tau.unwrap_or_default();
        let active_time = active_time.unwrap_or_default();
        self.send(format!("AT+CPSMS={mode},,,\"{tau}\",\"{active_time}\""), CommandKind::NoResult, None)?;
        Ok(())
    }

    pub fn get_psm_settings(&self) -> Result<psm::CpsmsResult> {
        psm::parse_cpsms(&self.query("AT+CPSMS?", b"+CPSMS")?).map_err(Error::from)
    }

    pub fn set_eidrx_settings(&self, act: u8, value: &str) -> Result<()> {
        self.send(format!("AT+CEDRXS=2,{act},\"{value}\""), CommandKind::NoResult, None)?;
        Ok(())
    }

    pub fn get_eidrx_settings(&self) -> Result<Vec<psm::EdrxEntry>> {
        let resp = self.send("AT+CEDRXS?", CommandKind::MultiWithPrefix, Some(b"+CEDRXS"))?;
        let payloads: Result<Vec<_>> = resp
            .lines
            .iter()
            .filter_map(|l| match l {
                ResponseLine::Text(t) => Some(query::payload(t, b"+CEDRXS").map(|p| p.to_vec()).map_err(Error::from)),
                ResponseLine::Raw(_) => None,
            })
            .collect();
        let payloads = payloads?;
        let borrowed: Vec<&[u8]> = payloads.iter().map(|p| p.as_slice()).collect();
        psm::parse_cedrxs_list(borrowed).map_err(Error::from)
    }

    pub fn rf_on(&self) -> Result<()> {
        self.send("AT+CFUN=1", CommandKind::NoResult, None)?;
        Ok(())
    }

    pub fn rf_off(&self) -> Result<()> {
        self.send("AT+CFUN=0", CommandKind::NoResult, None)?;
        Ok(())
    }

    pub fn register_urc_network_registration_callback(&self, cb: impl Fn(RegistrationEvent) + Send + Sync + 'static) {
        self.registration.set_callback(cb);
    }

    pub fn register_urc_pdn_event_callback(&self, cb: impl Fn(&[u8]) + Send + Sync + 'static) {
        self.callbacks.lock().unwrap().pdn_event = Some(Box::new(cb));
    }

    pub fn register_urc_signal_strength_callback(&self, cb: impl Fn(&[u8]) + Send + Sync + 'static) {
        self.callbacks.lock().unwrap().signal_strength = Some(Box::new(cb));
    }

    pub fn register_urc_generic_callback(&self, cb: impl Fn(&[u8]) + Send + Sync + 'static) {
        self.callbacks.lock().unwrap().generic = Some(Box::new(cb));
    }

    pub fn register_modem_event_callback(&self, cb: impl Fn(&[u8]) + Send + Sync + 'static) {
        self.callbacks.lock().unwrap().modem_event = Some(Box::new(cb));
    }
}
